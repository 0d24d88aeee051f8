use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use validator::Validate;

/// Client-reported device attributes sent in the `deviceData` body of the
/// check/report endpoints. Every field is optional; a missing field is part
/// of the identity (it canonicalizes differently from an empty value).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    #[validate(length(max = 64))]
    pub language: Option<String>,
    #[validate(length(max = 64))]
    pub platform: Option<String>,
    #[validate(length(max = 32))]
    pub screen_resolution: Option<String>,
    #[validate(length(max = 64))]
    pub timezone: Option<String>,
    pub cookie_enabled: Option<bool>,
    pub do_not_track: Option<bool>,
    pub hardware_concurrency: Option<u32>,
    pub max_touch_points: Option<u32>,
    pub color_depth: Option<u32>,
    pub pixel_ratio: Option<f64>,
    #[validate(length(max = 256))]
    pub canvas: Option<String>,
}

/// Header-derived subset used by the request-gating layer, which never sees
/// the client-side descriptor. This is a narrower identity than
/// [`DeviceDescriptor`], so the two fingerprints do not collide for the same
/// physical device. That asymmetry is intentional and must not be unified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderDescriptor {
    pub user_agent: Option<String>,
    pub accept_language: Option<String>,
    pub accept_encoding: Option<String>,
    pub platform_hint: Option<String>,
    pub ua_hint: Option<String>,
}

/// Digest of the full client-supplied descriptor, keyed by the request
/// User-Agent plus every descriptor field in fixed order.
pub fn device_fingerprint(user_agent: &str, descriptor: &DeviceDescriptor) -> String {
    digest(&canonical_device_string(user_agent, descriptor))
}

/// Digest of the header-derived descriptor used on the gating path.
pub fn header_fingerprint(descriptor: &HeaderDescriptor) -> String {
    digest(&canonical_header_string(descriptor))
}

fn digest(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn canonical_device_string(user_agent: &str, descriptor: &DeviceDescriptor) -> String {
    let mut out = String::new();
    push_field(&mut out, "ua", Some(user_agent));
    push_field(&mut out, "lang", descriptor.language.as_deref());
    push_field(&mut out, "platform", descriptor.platform.as_deref());
    push_field(&mut out, "screen", descriptor.screen_resolution.as_deref());
    push_field(&mut out, "tz", descriptor.timezone.as_deref());
    push_bool(&mut out, "cookies", descriptor.cookie_enabled);
    push_bool(&mut out, "dnt", descriptor.do_not_track);
    push_number(&mut out, "cores", descriptor.hardware_concurrency);
    push_number(&mut out, "touch", descriptor.max_touch_points);
    push_number(&mut out, "depth", descriptor.color_depth);
    push_ratio(&mut out, "ratio", descriptor.pixel_ratio);
    push_field(&mut out, "canvas", descriptor.canvas.as_deref());
    out
}

fn canonical_header_string(descriptor: &HeaderDescriptor) -> String {
    let mut out = String::new();
    push_field(&mut out, "ua", descriptor.user_agent.as_deref());
    push_field(&mut out, "accept-lang", descriptor.accept_language.as_deref());
    push_field(&mut out, "accept-enc", descriptor.accept_encoding.as_deref());
    push_field(&mut out, "platform-hint", descriptor.platform_hint.as_deref());
    push_field(&mut out, "ua-hint", descriptor.ua_hint.as_deref());
    out
}

// A missing field renders as the bare key with no `=`, so absence and an
// empty value stay distinguishable.
fn push_field(out: &mut String, key: &str, value: Option<&str>) {
    if !out.is_empty() {
        out.push('|');
    }
    out.push_str(key);
    if let Some(value) = value {
        out.push('=');
        out.push_str(value);
    }
}

fn push_bool(out: &mut String, key: &str, value: Option<bool>) {
    let rendered = value.map(|v| if v { "1" } else { "0" });
    push_field(out, key, rendered);
}

fn push_number(out: &mut String, key: &str, value: Option<u32>) {
    let rendered = value.map(|v| v.to_string());
    push_field(out, key, rendered.as_deref());
}

fn push_ratio(out: &mut String, key: &str, value: Option<f64>) {
    let rendered = value.map(|v| v.to_string());
    push_field(out, key, rendered.as_deref());
}
