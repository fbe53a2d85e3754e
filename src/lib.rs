//! Workspace-level integration tests live in `tests/`. This stub exists so
//! the root package has a build target; it exports nothing.
