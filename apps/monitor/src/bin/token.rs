//! Print a random token to share between the agent and the monitor.

use rand::RngCore;

fn main() {
    let mut key = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut key);
    println!("token: {}", hex::encode(key));
}
