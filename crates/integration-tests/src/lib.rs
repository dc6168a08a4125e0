//! Shared helpers for the cross-crate test suites.

use rl_ledger_memory::MemoryLedger;

/// The demo fixture shipped with the binary.
pub const DEMO_FIXTURE: &str = include_str!("../../../fixtures/demo.json");

/// Day covered by the demo fixture (2023-05-23).
pub const DEMO_DAY: u64 = 19_500;

pub const LILY: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
pub const ANON: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

/// Memory ledger seeded from [`DEMO_FIXTURE`].
pub fn demo_ledger() -> MemoryLedger {
    match MemoryLedger::from_fixture_str(DEMO_FIXTURE) {
        Ok(ledger) => ledger,
        Err(err) => panic!("demo fixture is invalid: {err}"),
    }
}
