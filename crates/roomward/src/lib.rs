//! # Roomward
//!
//! Coordinates shared rooms among applicants, approvers, maintainers and
//! cleaners.
//!
//! Each room is a small state machine (clean and empty, occupied, needs
//! cleaning, needs repair) with a pool of applications and per-role
//! subscribers. Roomward hosts rooms as actors, exposes them over
//! WebSocket, and pushes status changes to whoever registered for them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomward::prelude::*;
//!
//! # async fn demo() -> Result<(), RoomwardError> {
//! let server = RoomwardServer::builder()
//!     .bind("127.0.0.1:8080")
//!     .room(RoomConfig::new("seminar", 10))
//!     .build()
//!     .await?;
//! let seminar = server.room_ids().await[0];
//! tokio::spawn(server.run());
//!
//! let client = GatewayClient::connect("127.0.0.1:8080", Role::Applicant, Identity(1)).await?;
//! let reply = client
//!     .invoke(seminar, RoomRequest::Apply { identity: Identity(1), headcount: 4 })
//!     .await?;
//! assert!(reply.is_ok());
//! # Ok(())
//! # }
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod gateway;
mod handler;
mod server;

pub use error::RoomwardError;
pub use gateway::{
    DEFAULT_CALL_TIMEOUT, GatewayClient, GatewayError, LocalGateway, RoomGateway, rejection,
};
pub use server::{DEFAULT_IDLE_TIMEOUT, RoomwardServer, RoomwardServerBuilder};

pub mod prelude {
    pub use crate::{
        GatewayClient, GatewayError, LocalGateway, RoomGateway, RoomwardError, RoomwardServer,
        RoomwardServerBuilder,
    };
    pub use roomward_protocol::{
        Identity, RejectReason, Reply, Role, RoomId, RoomRequest, RoomStatus,
    };
    pub use roomward_room::{RoomConfig, RoomManager, Subscriber, SubscriberHandle};
}
