pub mod bookings;
pub mod credentials;
pub mod handlers;
pub mod middleware;
pub mod passengers;
pub mod routes;
pub mod runs;
pub mod ws;

pub use routes::create_router;
pub use ws::{forward_events, WsBroadcaster};
