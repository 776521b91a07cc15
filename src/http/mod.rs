//! The LIFX cloud HTTP binding of [`crate::RemoteService`]. Wire formats, verbs and
//! authentication live here and nowhere else; the core never sees a URL or a JSON body.

mod responses;
mod session;

pub use session::HttpRemoteService;
