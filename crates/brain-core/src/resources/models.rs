//! Wire types for the provisioning resources.
//!
//! Create/update payloads skip unset optionals so partial updates only
//! touch the fields that were given.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ===== Images =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub ceph_location: String,
    pub mon_host: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageCreate {
    pub name: String,
    pub ceph_location: String,
    pub mon_host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceph_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mon_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ===== MV200 accelerator hosts =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MvServer {
    pub id: String,
    pub name: String,
    pub ip_address: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub host_ip: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MvServerCreate {
    pub name: String,
    pub ip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MvServerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
}

// ===== Bare-metal servers =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BareMetalServer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub host_ip: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BareMetalServerCreate {
    pub name: String,
    pub host_ip: String,
    pub gateway: String,
    pub mac: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct BareMetalServerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_password: Option<String>,
}

/// OS login used for boot management on a bare-metal server.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerCredentials {
    pub user: String,
    pub pwd: String,
}

impl std::fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCredentials")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Which OS login a boot-management call should use.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// The login stored on the backend
    Saved,
    /// A login supplied with this call only
    Explicit(ServerCredentials),
}

impl CredentialSource {
    /// Query parameters understood by the boot endpoints
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            CredentialSource::Saved => vec![("use_saved", "true".to_string())],
            CredentialSource::Explicit(credentials) => vec![
                ("use_saved", "false".to_string()),
                ("user", credentials.user.clone()),
                ("pwd", credentials.pwd.clone()),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootEntriesResponse {
    pub entries: BTreeMap<String, String>,
    pub current: String,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsVerifyResponse {
    pub valid: bool,
    pub has_saved_credentials: bool,
    pub message: String,
}

// ===== System disks =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDisk {
    pub id: String,
    pub image_id: String,
    pub mv200_id: String,
    pub mv200_ip: String,
    pub size_gb: u64,
    pub mon_host: String,
    pub rbd_path: String,
    pub blk_id: i64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemDiskCreate {
    pub image_id: String,
    pub mv200_id: String,
    pub size_gb: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemDiskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SystemUser {
    pub name: String,
    pub password: String,
}

/// Provision a bare-metal instance: a system disk plus its first OS user.
#[derive(Clone, Serialize, Deserialize)]
pub struct BareMetalCreate {
    pub system_disk: SystemDiskCreate,
    pub system_user: SystemUser,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadToImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_pool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Status codes reported by the card agent for disk create/delete/rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskOperationResponse {
    pub efi_status: i64,
    pub cloudinit_status: i64,
}

// ===== Network interfaces =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub id: String,
    pub mv200_id: String,
    pub ip: String,
    pub vlan_tag: i64,
    pub gateway: String,
    #[serde(default = "default_mtu")]
    pub mtu: u32,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub dns: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ifname: Option<String>,
}

fn default_mtu() -> u32 {
    1500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceCreate {
    pub mv200_id: String,
    /// Host address with prefix length, e.g. `192.168.1.10/24`
    pub ip: String,
    pub vlan_tag: i64,
    pub gateway: String,
    pub mtu: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Only the description of an interface can change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceUpdate {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDelete {
    pub id: String,
    pub mv200_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_system_disk() {
        let json = r#"{"id": "d1", "image_id": "i1", "mv200_id": "m1", "mv200_ip": "10.0.0.5", "size_gb": 40, "mon_host": "10.0.0.1:6789", "rbd_path": "rbd/d1", "blk_id": 3}"#;
        let disk: SystemDisk = serde_json::from_str(json).unwrap();
        assert_eq!(disk.size_gb, 40);
        assert!(disk.description.is_none());
    }

    #[test]
    fn test_parse_interface_defaults_mtu() {
        let json = r#"{"id": "n1", "mv200_id": "m1", "ip": "192.168.1.10/24", "vlan_tag": 100, "gateway": "192.168.1.1"}"#;
        let iface: InterfaceInfo = serde_json::from_str(json).unwrap();
        assert_eq!(iface.mtu, 1500);
        assert!(iface.ifname.is_none());
    }

    #[test]
    fn test_partial_update_skips_unset_fields() {
        let update = ImageUpdate {
            description: Some("golden".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "description": "golden" })
        );
    }

    #[test]
    fn test_boot_entries_with_null_next() {
        let json = r#"{"entries": {"0001": "ubuntu", "0003": "PXE"}, "current": "0001", "next": null}"#;
        let boot: BootEntriesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(boot.entries.len(), 2);
        assert!(boot.next.is_none());
        assert!(boot.default.is_none());
    }

    #[test]
    fn test_credential_source_params() {
        assert_eq!(
            CredentialSource::Saved.params(),
            vec![("use_saved", "true".to_string())]
        );
        let explicit = CredentialSource::Explicit(ServerCredentials {
            user: "root".to_string(),
            pwd: "pw".to_string(),
        });
        assert_eq!(explicit.params().len(), 3);
        assert!(!format!("{:?}", explicit).contains("\"pw\""));
    }
}
