pub mod error;
pub mod image;
pub mod privilege;
pub mod settings;

pub use error::*;
pub use image::{ImageSettings, PROJECT_NAME, image_name, version_tag};
pub use privilege::drop_privileges;
pub use settings::Settings;
