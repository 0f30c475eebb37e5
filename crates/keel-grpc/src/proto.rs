//! Generated protobuf types.

pub mod user {
    tonic::include_proto!("keel.user.v1");
}

pub mod health {
    tonic::include_proto!("keel.health.v1");
}
