pub mod html;
pub mod id;
pub mod validation;
