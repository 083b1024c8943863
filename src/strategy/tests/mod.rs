use super::test_helpers::{Step, TEST_SHARD, create_test_strategy, settle};
use super::*;
use crate::error::Error;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod lifecycle;

const RETRY: Duration = Duration::from_secs(1);
