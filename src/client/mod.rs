// Client module - signed HTTP calls against both game surfaces
pub mod api;
pub mod transport;

pub use api::{Action, GameClient, Surface};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, RequestBody, ReqwestTransport, Transport};
