//! 具体渠道实现

pub mod africastalking;
pub mod unavailable;

pub use africastalking::{AfricasTalkingClient, AfricasTalkingConfig, AfricasTalkingSms, AfricasTalkingVoice};
pub use unavailable::UnavailableChannel;
