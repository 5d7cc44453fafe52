/// Fatal convergence failures, each tagged with the operation it occurred
/// in. None are retried internally; best-effort cleanup failures are logged
/// and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to compute network configuration")]
    ComputeConfig(#[source] anyhow::Error),

    #[error("failed to enable IPv6 in kernel")]
    EnableIpv6(#[source] anyhow::Error),

    #[error("failed to update network configs")]
    WriteConfigs(#[source] anyhow::Error),

    #[error("failed to restart networking")]
    RestartNetworking(#[source] anyhow::Error),

    #[error("failed to validate static network configuration")]
    ValidateAddresses(#[source] anyhow::Error),

    #[error("failed to validate DNS configuration")]
    ValidateDns(#[source] anyhow::Error),

    #[error("failed to update resolver configuration")]
    ResolvConf(#[source] anyhow::Error),
}
