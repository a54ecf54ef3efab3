pub mod gateway;
pub mod templates;
pub mod transport;

pub use gateway::{DispatchError, DispatchGateway};
pub use templates::{RenderError, RenderedEmail, TemplateRenderer};
pub use transport::{
    CaptureFailure, CaptureTransport, DispatchReceipt, HttpProviderTransport, MailMessage,
    MailTransport, NoopTransport, SmtpTransport,
};
