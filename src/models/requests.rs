//! Request bodies accepted by the REST API.

use serde::Deserialize;

/// Request body for reserving a gift or contributing to an open-amount gift.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    #[serde(default)]
    pub guest_name: String,
    /// Contributed amount, only read for open-amount gifts
    #[serde(default)]
    pub amount: Option<String>,
}

/// Admin add/edit form, as typed by the administrator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftForm {
    pub name: String,
    /// Free text, e.g. `4200`, `4200.50` or `4.200,00`
    pub price: String,
    pub category: String,
    pub icon: String,
    #[serde(default)]
    pub description: String,
}

/// Request body for saving the payment key.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePixKeyRequest {
    pub pix_key: String,
}

/// Request body for saving the payment QR image.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveQrCodeRequest {
    pub qrcode: String,
}

/// Query parameters for listing the catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub category: Option<String>,
}
