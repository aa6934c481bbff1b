pub mod envelope;
pub mod http_join_client;
pub mod join;
pub mod message;
pub mod room_id;
pub mod signaling_error;

pub use http_join_client::HttpJoinClient;
pub use join::{JoinClient, JoinRequest, JoinResponse, JoinResult};
pub use message::{Decoded, SignalingMessage};
pub use room_id::{ROOM_ID_LEN, generate_room_id};
pub use signaling_error::SignalingError;
