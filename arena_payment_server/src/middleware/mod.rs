mod acl;
mod hmac;

pub use acl::AclMiddlewareFactory;
pub use hmac::HmacMiddlewareFactory;
