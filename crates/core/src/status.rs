//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table, and its wire name
//! matches the `name` column of that table.

use serde::{Deserialize, Serialize};

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Every variant in seed order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by its database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some($name::$variant), )+
                    _ => None,
                }
            }

            /// Lowercase wire name, identical to the lookup table `name`.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $wire, )+
                }
            }

            /// Parse a wire name (case-insensitive).
            pub fn parse(value: &str) -> Option<Self> {
                let value = value.trim().to_ascii_lowercase();
                match value.as_str() {
                    $( $wire => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Project lifecycle status.
    ProjectStatus {
        Draft = 1 => "draft",
        Generating = 2 => "generating",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
        Paused = 5 => "paused",
    }
}

define_status_enum! {
    /// Per-kind scene asset status.
    ///
    /// `Loading` is an alternate of `Processing` that some workers report
    /// while they stream a result back.
    AssetStatus {
        Draft = 1 => "draft",
        Pending = 2 => "pending",
        Queued = 3 => "queued",
        Processing = 4 => "processing",
        Loading = 5 => "loading",
        Completed = 6 => "completed",
        Failed = 7 => "failed",
        Error = 8 => "error",
    }
}

define_status_enum! {
    /// Background job execution status.
    JobStatus {
        Queued = 1 => "queued",
        Active = 2 => "active",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
    }
}

impl AssetStatus {
    /// A worker currently owns this kind.
    pub fn is_in_flight(self) -> bool {
        matches!(self, AssetStatus::Processing | AssetStatus::Loading)
    }

    /// Waiting to be handed to a worker.
    pub fn is_dispatchable(self) -> bool {
        matches!(self, AssetStatus::Pending | AssetStatus::Queued)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, AssetStatus::Failed | AssetStatus::Error)
    }
}

impl JobStatus {
    /// Completed and failed jobs never change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}
