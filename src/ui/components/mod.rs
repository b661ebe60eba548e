mod command_input;
mod input;
mod key_result;
mod toast;

pub use command_input::{CommandEvent, CommandInput};
pub use key_result::KeyResult;
pub use toast::Toast;
