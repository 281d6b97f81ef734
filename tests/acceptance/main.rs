//! Acceptance tests for deployment processing using Cucumber.
//!
//! ```bash
//! cargo test --test acceptance --features test-utils
//! ```

mod steps;

use cucumber::World;
use steps::deployment::DeploymentWorld;

#[tokio::main]
async fn main() {
    println!("\n=== Running Deployment Acceptance Tests ===\n");
    DeploymentWorld::cucumber()
        .fail_on_skipped()
        .run("tests/acceptance/features/deployment.feature")
        .await;
}
