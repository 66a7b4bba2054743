use std::time::Duration;

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::cache::StorageError;
use crate::network::ResolvedNetwork;

pub fn network_resolved(network: &ResolvedNetwork) {
    debug!(
        target: "monitoring::network",
        event = "resolved",
        chain_id = network.chain_id(),
        kind = network.kind(),
        "network resolved"
    );
    counter!("fhevm_network_resolved_total", "kind" => network.kind()).increment(1);
}

pub fn mock_metadata_unavailable(chain_id: u64, rpc_url: &str, reason: &str) {
    info!(
        target: "monitoring::network",
        event = "mock_metadata_unavailable",
        chain_id,
        rpc_url,
        reason,
        "mock chain without relayer metadata, falling back to relayer path"
    );
    counter!("fhevm_mock_fallback_total").increment(1);
}

pub fn sdk_load_finished(url: &str, success: bool, elapsed: Duration) {
    let result = if success { "ok" } else { "error" };
    info!(
        target: "monitoring::relayer",
        event = "sdk_load",
        url,
        result,
        elapsed_ms = elapsed.as_millis() as u64,
        "relayer sdk load finished"
    );
    counter!("fhevm_sdk_load_total", "result" => result).increment(1);
    histogram!("fhevm_sdk_load_seconds").record(elapsed.as_secs_f64());
}

pub fn sdk_initialized(initialized: bool, elapsed: Duration) {
    let result = if initialized { "ok" } else { "rejected" };
    info!(
        target: "monitoring::relayer",
        event = "sdk_init",
        result,
        elapsed_ms = elapsed.as_millis() as u64,
        "relayer sdk initSDK returned"
    );
    counter!("fhevm_sdk_init_total", "result" => result).increment(1);
    histogram!("fhevm_sdk_init_seconds").record(elapsed.as_secs_f64());
}

pub fn cache_lookup(acl_address: &str, key_hit: bool, params_hit: bool) {
    debug!(
        target: "monitoring::cache",
        event = "lookup",
        acl_address,
        key_hit,
        params_hit,
        "public key cache lookup"
    );
    let outcome = |hit: bool| if hit { "hit" } else { "miss" };
    counter!(
        "fhevm_cache_lookup_total",
        "entry" => "public_key",
        "outcome" => outcome(key_hit)
    )
    .increment(1);
    counter!(
        "fhevm_cache_lookup_total",
        "entry" => "public_params",
        "outcome" => outcome(params_hit)
    )
    .increment(1);
}

pub fn cache_write_failed(acl_address: &str, error: &StorageError) {
    warn!(
        target: "monitoring::cache",
        event = "write_failed",
        acl_address,
        error = %error,
        "failed to write public key material back to cache, instance is still returned"
    );
    counter!("fhevm_cache_write_failures_total").increment(1);
}

pub fn instance_created(kind: &'static str, elapsed: Duration) {
    info!(
        target: "monitoring::provisioning",
        event = "created",
        kind,
        elapsed_ms = elapsed.as_millis() as u64,
        "fhevm instance created"
    );
    counter!("fhevm_instances_created_total", "kind" => kind).increment(1);
    histogram!("fhevm_provisioning_seconds", "kind" => kind).record(elapsed.as_secs_f64());
}

pub fn provisioning_failed(code: &'static str, elapsed: Duration) {
    if code == "ABORTED" {
        debug!(
            target: "monitoring::provisioning",
            event = "aborted",
            elapsed_ms = elapsed.as_millis() as u64,
            "fhevm provisioning aborted"
        );
    } else {
        warn!(
            target: "monitoring::provisioning",
            event = "failed",
            code,
            elapsed_ms = elapsed.as_millis() as u64,
            "fhevm provisioning failed"
        );
    }
    counter!("fhevm_provisioning_failures_total", "code" => code).increment(1);
}
