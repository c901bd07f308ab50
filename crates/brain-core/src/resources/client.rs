//! Typed CRUD calls for each managed resource kind.
//!
//! These are one-to-one wrappers over backend endpoints. Token handling and
//! error notices are entirely the pipeline's business.

use std::sync::Arc;

use crate::api::{ApiError, ApiRequest, RequestPipeline};

use super::models::{
    BareMetalCreate, BareMetalServer, BareMetalServerCreate, BareMetalServerUpdate, BootEntriesResponse,
    CredentialSource, CredentialsVerifyResponse, DiskOperationResponse, Image, ImageCreate, ImageUpdate,
    InterfaceCreate, InterfaceDelete, InterfaceInfo, InterfaceUpdate, MvServer, MvServerCreate, MvServerUpdate,
    ServerCredentials, SystemDisk, SystemDiskUpdate, UploadToImage,
};

const IMAGES: &str = "/images";
const MV_SERVERS: &str = "/mv-servers";
const BARE_METALS: &str = "/bare-metals";
const SYSTEM_DISKS: &str = "/system-disks";
const NETWORKS: &str = "/networks";

type Result<T> = std::result::Result<T, ApiError>;

/// Clone is cheap - the pipeline is shared.
#[derive(Clone)]
pub struct ResourceClient {
    pipeline: Arc<RequestPipeline>,
}

impl ResourceClient {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    fn with_params(mut request: ApiRequest, params: Vec<(&'static str, String)>) -> ApiRequest {
        for (key, value) in params {
            request = request.param(key, value);
        }
        request
    }

    // ===== Images =====

    pub async fn list_images(&self) -> Result<Vec<Image>> {
        self.pipeline.request(ApiRequest::get(IMAGES)).await
    }

    pub async fn get_image(&self, id: &str) -> Result<Image> {
        self.pipeline.request(ApiRequest::get(format!("{}/{}", IMAGES, id))).await
    }

    pub async fn create_image(&self, image: &ImageCreate) -> Result<Image> {
        self.pipeline.request(ApiRequest::post(IMAGES).json(image)?).await
    }

    pub async fn update_image(&self, id: &str, update: &ImageUpdate) -> Result<Image> {
        self.pipeline
            .request(ApiRequest::put(format!("{}/{}", IMAGES, id)).json(update)?)
            .await
    }

    pub async fn delete_image(&self, id: &str) -> Result<()> {
        self.pipeline.request(ApiRequest::delete(format!("{}/{}", IMAGES, id))).await
    }

    // ===== MV200 hosts =====

    pub async fn list_mv_servers(&self) -> Result<Vec<MvServer>> {
        self.pipeline.request(ApiRequest::get(MV_SERVERS)).await
    }

    pub async fn get_mv_server(&self, id: &str) -> Result<MvServer> {
        self.pipeline.request(ApiRequest::get(format!("{}/{}", MV_SERVERS, id))).await
    }

    pub async fn create_mv_server(&self, server: &MvServerCreate) -> Result<MvServer> {
        self.pipeline.request(ApiRequest::post(MV_SERVERS).json(server)?).await
    }

    pub async fn update_mv_server(&self, id: &str, update: &MvServerUpdate) -> Result<MvServer> {
        self.pipeline
            .request(ApiRequest::put(format!("{}/{}", MV_SERVERS, id)).json(update)?)
            .await
    }

    pub async fn delete_mv_server(&self, id: &str) -> Result<()> {
        self.pipeline.request(ApiRequest::delete(format!("{}/{}", MV_SERVERS, id))).await
    }

    // ===== Bare-metal servers =====

    pub async fn list_bare_metals(&self) -> Result<Vec<BareMetalServer>> {
        self.pipeline.request(ApiRequest::get(BARE_METALS)).await
    }

    pub async fn get_bare_metal(&self, id: &str) -> Result<BareMetalServer> {
        self.pipeline.request(ApiRequest::get(format!("{}/{}", BARE_METALS, id))).await
    }

    pub async fn create_bare_metal(&self, server: &BareMetalServerCreate) -> Result<BareMetalServer> {
        self.pipeline.request(ApiRequest::post(BARE_METALS).json(server)?).await
    }

    pub async fn update_bare_metal(&self, id: &str, update: &BareMetalServerUpdate) -> Result<BareMetalServer> {
        self.pipeline
            .request(ApiRequest::put(format!("{}/{}", BARE_METALS, id)).json(update)?)
            .await
    }

    pub async fn delete_bare_metal(&self, id: &str) -> Result<()> {
        self.pipeline.request(ApiRequest::delete(format!("{}/{}", BARE_METALS, id))).await
    }

    pub async fn boot_entries(&self, id: &str, credentials: &CredentialSource) -> Result<BootEntriesResponse> {
        let request = ApiRequest::get(format!("{}/{}/boot-entries", BARE_METALS, id));
        self.pipeline
            .request(Self::with_params(request, credentials.params()))
            .await
    }

    pub async fn set_boot_entry(
        &self,
        id: &str,
        boot_id: &str,
        set_default: bool,
        credentials: &CredentialSource,
    ) -> Result<()> {
        let request = ApiRequest::post(format!("{}/{}/set-boot", BARE_METALS, id))
            .param("boot_id", boot_id)
            .param("set_default", set_default);
        self.pipeline
            .request(Self::with_params(request, credentials.params()))
            .await
    }

    pub async fn verify_credentials(&self, id: &str, credentials: &CredentialSource) -> Result<CredentialsVerifyResponse> {
        let request = ApiRequest::post(format!("{}/{}/verify-credentials", BARE_METALS, id));
        self.pipeline
            .request(Self::with_params(request, credentials.params()))
            .await
    }

    pub async fn update_server_credentials(&self, id: &str, credentials: &ServerCredentials) -> Result<()> {
        self.pipeline
            .request(ApiRequest::put(format!("{}/{}/credentials", BARE_METALS, id)).json(credentials)?)
            .await
    }

    pub async fn power_cycle(&self, id: &str) -> Result<()> {
        self.pipeline
            .request(ApiRequest::post(format!("{}/{}/power-cycle", BARE_METALS, id)))
            .await
    }

    pub async fn power_reset(&self, id: &str) -> Result<()> {
        self.pipeline
            .request(ApiRequest::post(format!("{}/{}/power-reset", BARE_METALS, id)))
            .await
    }

    // ===== System disks =====

    pub async fn list_system_disks(&self) -> Result<Vec<SystemDisk>> {
        self.pipeline.request(ApiRequest::get(SYSTEM_DISKS)).await
    }

    pub async fn get_system_disk(&self, id: &str) -> Result<SystemDisk> {
        self.pipeline.request(ApiRequest::get(format!("{}/{}", SYSTEM_DISKS, id))).await
    }

    pub async fn create_system_disk(&self, create: &BareMetalCreate) -> Result<DiskOperationResponse> {
        self.pipeline.request(ApiRequest::post(SYSTEM_DISKS).json(create)?).await
    }

    pub async fn update_system_disk(&self, id: &str, update: &SystemDiskUpdate) -> Result<SystemDisk> {
        self.pipeline
            .request(ApiRequest::put(format!("{}/{}", SYSTEM_DISKS, id)).json(update)?)
            .await
    }

    pub async fn delete_system_disk(&self, id: &str) -> Result<DiskOperationResponse> {
        self.pipeline.request(ApiRequest::delete(format!("{}/{}", SYSTEM_DISKS, id))).await
    }

    pub async fn upload_to_image(&self, id: &str, upload: &UploadToImage) -> Result<()> {
        self.pipeline
            .request(ApiRequest::post(format!("{}/{}/upload", SYSTEM_DISKS, id)).json(upload)?)
            .await
    }

    pub async fn rebuild_from_image(&self, id: &str, image_id: &str) -> Result<DiskOperationResponse> {
        self.pipeline
            .request(ApiRequest::post(format!("{}/{}/rebuild", SYSTEM_DISKS, id)).param("image_id", image_id))
            .await
    }

    // ===== Network interfaces =====

    pub async fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        self.pipeline.request(ApiRequest::get(NETWORKS)).await
    }

    pub async fn get_interface(&self, id: &str) -> Result<InterfaceInfo> {
        self.pipeline.request(ApiRequest::get(format!("{}/{}", NETWORKS, id))).await
    }

    pub async fn create_interface(&self, create: &InterfaceCreate) -> Result<InterfaceInfo> {
        self.pipeline.request(ApiRequest::post(NETWORKS).json(create)?).await
    }

    pub async fn update_interface(&self, update: &InterfaceUpdate) -> Result<InterfaceInfo> {
        self.pipeline.request(ApiRequest::put(NETWORKS).json(update)?).await
    }

    /// Interfaces are deleted by body, not by path.
    pub async fn delete_interface(&self, id: &str, mv200_id: &str) -> Result<()> {
        let target = InterfaceDelete {
            id: id.to_string(),
            mv200_id: mv200_id.to_string(),
        };
        self.pipeline.request(ApiRequest::delete(NETWORKS).json(&target)?).await
    }
}
