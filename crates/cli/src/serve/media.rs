//! Image-host upload boundary.
//!
//! When enabled, image files are pushed to a Cloudinary-compatible upload
//! endpoint with an unsigned preset and a fixed size-limiting transformation.
//! Everything else stays in archive storage.

use serde::Deserialize;

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";
const BOUNDARY: &str = "siad-upload-7d9f2c1e";

/// Image-host settings.
#[derive(Debug, Clone)]
pub(crate) struct MediaConfig {
    pub(crate) enabled: bool,
    pub(crate) cloud_name: Option<String>,
    pub(crate) upload_preset: Option<String>,
    /// Top-level folder; uploads land in `{folder}/{purpose}`.
    pub(crate) folder: String,
    pub(crate) max_width: u32,
    pub(crate) api_base: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cloud_name: None,
            upload_preset: None,
            folder: "siad".to_string(),
            max_width: 1600,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl MediaConfig {
    /// Whether a file of this MIME type goes to the image host.
    pub(crate) fn accepts(&self, mime_type: &str) -> bool {
        self.enabled
            && self.cloud_name.is_some()
            && self.upload_preset.is_some()
            && mime_type.starts_with("image/")
    }

    pub(crate) fn transformation(&self) -> String {
        format!("c_limit,w_{}/q_auto", self.max_width)
    }

    fn upload_url(&self, cloud_name: &str) -> String {
        format!(
            "{}/{}/image/upload",
            self.api_base.trim_end_matches('/'),
            cloud_name
        )
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

fn text_part(body: &mut Vec<u8>, name: &str, value: &str) {
    body.extend_from_slice(
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(value.as_bytes());
    body.extend_from_slice(b"\r\n");
}

/// Multipart body for one upload. ureq v3 has no multipart support, so the
/// form is assembled by hand.
pub(crate) fn multipart_body(
    config: &MediaConfig,
    preset: &str,
    purpose: &str,
    file_name: &str,
    mime_type: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    let safe_name = file_name.replace(['"', '\r', '\n'], "_");
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{safe_name}\"\r\nContent-Type: {mime_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
    text_part(&mut body, "upload_preset", preset);
    text_part(&mut body, "folder", &format!("{}/{}", config.folder, purpose));
    text_part(&mut body, "transformation", &config.transformation());
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Upload an image and return its secure URL. Blocking; run it on the
/// blocking pool.
pub(crate) fn upload_image(
    config: &MediaConfig,
    purpose: &str,
    file_name: &str,
    mime_type: &str,
    bytes: &[u8],
) -> Result<String, String> {
    let (Some(cloud_name), Some(preset)) = (&config.cloud_name, &config.upload_preset) else {
        return Err("image host is not configured".to_string());
    };
    let body = multipart_body(config, preset, purpose, file_name, mime_type, bytes);
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");

    let agent = ureq::Agent::new_with_defaults();
    let response = agent
        .post(&config.upload_url(cloud_name))
        .header("Content-Type", &content_type)
        .send(&body)
        .map_err(|e| format!("image upload failed: {}", e))?;
    let parsed: UploadResponse = response
        .into_body()
        .read_json()
        .map_err(|e| format!("could not parse image upload response: {}", e))?;
    tracing::info!(url = %parsed.secure_url, purpose, "uploaded image to host");
    Ok(parsed.secure_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> MediaConfig {
        MediaConfig {
            enabled: true,
            cloud_name: Some("demo".to_string()),
            upload_preset: Some("unsigned".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn only_images_go_to_the_host() {
        let config = enabled();
        assert!(config.accepts("image/png"));
        assert!(!config.accepts("application/pdf"));
        assert!(!MediaConfig::default().accepts("image/png"));
    }

    #[test]
    fn transformation_limits_width() {
        let config = MediaConfig {
            max_width: 800,
            ..enabled()
        };
        assert_eq!(config.transformation(), "c_limit,w_800/q_auto");
        assert_eq!(
            config.upload_url("demo"),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }

    #[test]
    fn multipart_carries_folder_and_file() {
        let body = multipart_body(
            &enabled(),
            "unsigned",
            "documents",
            "scan\".png",
            "image/png",
            b"PNGDATA",
        );
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("filename=\"scan_.png\""));
        assert!(text.contains("Content-Type: image/png\r\n\r\nPNGDATA\r\n"));
        assert!(text.contains("name=\"folder\"\r\n\r\nsiad/documents\r\n"));
        assert!(text.contains("name=\"transformation\"\r\n\r\nc_limit,w_1600/q_auto\r\n"));
        assert!(text.ends_with(&format!("--{BOUNDARY}--\r\n")));
    }
}
