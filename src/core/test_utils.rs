//! Test utilities for arena-based testing.
//!
//! Translation sessions borrow their arena, so tests that need one go
//! through a [`test::TestContext`] that owns it.

#[cfg(test)]
pub mod test {
    use super::super::session::TranslationSession;
    use super::super::userop::UseropLibrary;
    use super::super::collab::RegisterMap;
    use crate::config::TranslatorConfig;
    use bumpalo::Bump;

    /// Owns the arena and the read-only tables a translation borrows.
    pub struct TestContext {
        arena: Bump,
        pub userops: UseropLibrary,
        pub registers: RegisterMap,
        pub config: TranslatorConfig,
    }

    impl TestContext {
        pub fn new() -> Self {
            Self {
                arena: Bump::new(),
                userops: UseropLibrary::builtin(),
                registers: RegisterMap::x86_64(),
                config: TranslatorConfig::default(),
            }
        }

        pub fn arena(&self) -> &Bump {
            &self.arena
        }

        /// The returned session borrows from the context.
        pub fn create_session(&self) -> TranslationSession<'_> {
            TranslationSession::new(&self.arena)
        }

        pub fn memory_used(&self) -> usize {
            self.arena.allocated_bytes()
        }

        pub fn with_session<F, R>(&self, f: F) -> R
        where
            F: FnOnce(&TranslationSession<'_>) -> R,
        {
            let session = self.create_session();
            f(&session)
        }
    }

    impl Default for TestContext {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Run a test with a temporary context.
    pub fn with_test_context<F, R>(f: F) -> R
    where
        F: FnOnce(&TestContext) -> R,
    {
        let ctx = TestContext::new();
        f(&ctx)
    }
}
