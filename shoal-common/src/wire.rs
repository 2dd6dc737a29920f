//! # Wire Messages
//!
//! Length-delimited binary messages exchanged between peers. The structs are
//! declared by hand with explicit prost field tags so the encoding stays
//! pinned without a build-time codegen step; the layout is part of the peer
//! protocol and must not change between releases.

/// Request for a value owned by a remote peer.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FetchRequest {
    /// Name of the cache group holding the key.
    #[prost(string, tag = "1")]
    pub group: String,
    /// Key being requested.
    #[prost(string, tag = "2")]
    pub key: String,
}

/// Response carrying the cached bytes.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FetchResponse {
    /// Raw value bytes; opaque to the transport.
    #[prost(bytes = "vec", tag = "1")]
    pub value: Vec<u8>,
}
