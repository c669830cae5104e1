pub mod entities;
pub mod overlay;
pub mod value_objects;
