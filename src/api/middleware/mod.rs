mod access;
mod gate;

pub use access::subject_access;
pub use gate::role_gate;
