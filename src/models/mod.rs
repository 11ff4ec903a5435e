pub mod assessment;
pub mod assignment;
pub mod question;
pub mod response;
pub mod session;
