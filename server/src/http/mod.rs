pub mod dto;
mod error;
mod handlers;
mod server;
mod state;


pub use error::{ApiError, ApiResult};
pub use handlers::{
    COPY_SOURCE_HEADER, COPY_SOURCE_VERSION_ID_HEADER, DELETE_MARKER_HEADER, REQUESTER_HEADER,
    VERSION_ID_HEADER,
};
pub use server::{router, start_server};
