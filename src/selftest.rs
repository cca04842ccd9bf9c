/*!
 * Semaphore Self-Test
 * Ping-pong between the caller and a helper thread
 */

use crate::core::errors::ThreadError;
use crate::core::types::PRI_DEFAULT;
use crate::scheduler::Kernel;
use crate::sync::Semaphore;
use std::sync::Arc;
use tracing::info;

const ROUNDS: usize = 10;

/// Bounce control between the caller and a helper thread ten times
///
/// Returns the helper's tid. Must run on the thread that is current.
pub fn sema_self_test(kernel: &Kernel) -> Result<u32, ThreadError> {
    info!("Testing semaphores...");
    let ping = Arc::new(Semaphore::new(kernel, 0));
    let pong = Arc::new(Semaphore::new(kernel, 0));

    let helper = {
        let ping = Arc::clone(&ping);
        let pong = Arc::clone(&pong);
        kernel.create("sema-test", PRI_DEFAULT, move || {
            for _ in 0..ROUNDS {
                ping.down();
                pong.up();
            }
        })?
    };

    for _ in 0..ROUNDS {
        ping.up();
        pong.down();
    }
    info!(helper, "Semaphore self-test done");
    Ok(helper)
}
