/*!
# lbwatch DevKit - test doubles for the pools API

Helpers for exercising the watcher without a real account:
- In-process HTTP mock of `GET /accounts/{id}/load_balancers/pools`
- JSON builders for pools, origins and paginated envelopes
*/

pub mod fixtures;
pub mod mock_api;

pub use fixtures::{api_error, origin, pool, pools_page};
pub use mock_api::{MockPage, MockPoolsApi, RecordedRequest};
