// Server Identity Port

/// This node's identity, stable for the process lifetime
pub trait ServerIdentity: Send + Sync {
    fn id(&self) -> &str;
}

pub mod mocks {
    use super::*;

    pub struct MockServerIdentity(pub String);

    impl MockServerIdentity {
        pub fn new(id: impl Into<String>) -> Self {
            Self(id.into())
        }
    }

    impl ServerIdentity for MockServerIdentity {
        fn id(&self) -> &str {
            &self.0
        }
    }
}
