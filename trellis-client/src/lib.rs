//! # trellis-client
//!
//! [`HttpRemote`], the [`trellis_core::RemoteState`] implementation that talks
//! to the content service over HTTPS with a bearer token.
//!
//! Routes, all relative to the configured `api_url`:
//!
//! | call                | route                                  |
//! |---------------------|----------------------------------------|
//! | `get_site`          | `GET    /sites/{site}`                 |
//! | `get_blocks`        | `GET    /sites/{site}/blocks`          |
//! | `create_block`      | `POST   /sites/{site}/blocks`          |
//! | `update_block`      | `PATCH  /sites/{site}/blocks/{id}`     |
//! | `delete_block`      | `DELETE /sites/{site}/blocks/{id}`     |
//! | `*_partial(s)`      | same under `/sites/{site}/partials`    |
//! | `update_site_theme` | `PATCH  /sites/{site}/theme`           |

pub mod http;
mod wire;

pub use http::HttpRemote;
