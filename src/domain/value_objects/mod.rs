pub mod auth_context;
pub mod entity_id;
pub mod http_method;
pub mod mutation_body;
pub mod mutation_id;
pub mod resource_url;

pub use auth_context::AuthContext;
pub use entity_id::EntityId;
pub use http_method::{HttpMethod, MutationMethod};
pub use mutation_body::{Attachment, AttachmentRef, MutationBody, RequestBody};
pub use mutation_id::MutationId;
pub use resource_url::ResourceUrl;
