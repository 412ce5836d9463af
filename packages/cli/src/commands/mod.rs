pub mod combine;
pub mod init;
mod input;
pub mod inspect;
pub mod json;
pub mod url;

pub use combine::{combine, CombineArgs};
pub use init::{init, InitArgs};
pub use inspect::{inspect, InspectArgs};
pub use json::{json, JsonArgs};
pub use url::{url, UrlArgs};
