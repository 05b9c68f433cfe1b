/// Fresh intelligence snapshot. Producer: poll scheduler.
pub const RAW_INTEL: &str = "RAW_INTEL";

/// Full shared target list after a local write or a remote merge.
pub const SHARED_TARGETS_UPDATED: &str = "SHARED_TARGETS_UPDATED";

/// Orders payload read from the scope's orders path, republished verbatim.
pub const COMMANDER_ORDERS: &str = "COMMANDER_ORDERS";

/// User asked to share a target. Producer: presentation layer.
pub const REQUEST_ADD_SHARED_TARGET: &str = "REQUEST_ADD_SHARED_TARGET";
