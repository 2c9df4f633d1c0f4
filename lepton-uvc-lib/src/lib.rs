pub mod camera;
pub mod command;
pub mod constants;
pub mod error;
pub mod frame;
pub mod i2c;
pub mod mlx;
pub mod observer;
pub mod port;
pub mod sdk;
pub mod status;
pub mod transport;
pub mod uvc;


// Re-export the main types for easy access
pub use command::CommandId;
pub use error::{ErrorKind, LepError};
pub use i2c::{I2cAddress, I2cReply, I2cScan};
pub use port::LeptonPort;
pub use status::LepResult;
pub use transport::{ControlTransport, ExtensionUnit};
pub use uvc::{PortConfig, UvcTransport};
