pub mod mapper;
pub mod parser;
pub mod session;
pub mod validator;

pub use mapper::*;
pub use parser::*;
pub use session::*;
pub use validator::*;
