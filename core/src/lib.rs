pub mod auth;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod message;
pub mod redirect;
pub mod routes;
pub mod stream;
pub mod telemetry;

pub use auth::{AuthRecovery, WithAuthRecovery};
pub use backend::{ChatBackend, DirectoryBackend, HttpBackend, MockBackend, TransportError};
pub use config::{ClientSettings, ConfigError};
pub use dispatch::{DeliveryVariant, DispatchError, Dispatcher};
pub use message::{AssistantDescriptor, FileAttachment, OutgoingChatMessage};
pub use redirect::{CookieRedirectStore, MemoryRedirectStore, Navigator, RedirectPolicy, RedirectStore};
pub use routes::{reconcile, refresh_routes, DirectoryError, RouteEntry, RouteGroup, RouteNode};
pub use stream::{ChatEvent, ChatReply, Citation, EventStream, StreamError};
pub use tokio_util::sync::CancellationToken;
