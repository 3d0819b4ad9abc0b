pub mod harness;

pub use harness::{labels_with_status, sample_labels, Call, Fault, FakeEngine, RecordingSink, TestContext};
