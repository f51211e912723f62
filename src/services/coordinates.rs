// src/services/coordinates.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::ServiceRegion;

// -?D[-: ]M[-: ]S(.ddd)? ; os segundos são opcionais ("25 30" = 25.5)
static DMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-)?(\d{1,3})[-: ]+(\d{1,2})(?:[-: ]+(\d{1,2}(?:\.\d+)?))?$")
        .expect("DMS pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateStatus {
    Ok,
    Swapped,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCoordinates {
    pub lat: f64,
    pub lng: f64,
    pub status: CoordinateStatus,
    pub message: String,
}

impl NormalizedCoordinates {
    pub fn is_usable(&self) -> bool {
        self.status != CoordinateStatus::Invalid
    }

    fn invalid(lat: f64, lng: f64, message: String) -> Self {
        Self { lat, lng, status: CoordinateStatus::Invalid, message }
    }
}

/// Remove marcadores de grau/minuto/segundo e letras de direção, e colapsa espaços.
fn clean(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .map(|c| match c {
            '°' | 'º' | '\'' | '"' | '′' | '″' | '’' | '”' => ' ',
            'N' | 'S' | 'E' | 'W' | 'n' | 's' | 'e' | 'w' => ' ',
            other => other,
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Converte um eixo em graus decimais. Texto ilegível vira 0.
pub fn parse_axis(raw: &str) -> f64 {
    // Decimal puro primeiro: sinal e expoente ("2.5e1") ficam intactos
    if let Some(value) = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()) {
        return value;
    }

    let cleaned = clean(raw);

    if let Some(caps) = DMS_RE.captures(&cleaned) {
        let part = |i: usize| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        let (degrees, minutes, seconds) = (part(2), part(3), part(4));
        if minutes >= 60.0 || seconds >= 60.0 {
            return 0.0;
        }
        let value = degrees + minutes / 60.0 + seconds / 3600.0;
        return if caps.get(1).is_some() { -value } else { value };
    }

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn out_of_range(axis: &str, value: f64, min: f64, max: f64) -> Option<String> {
    if value < min {
        Some(format!("{axis} {value:.6} is below [{min}, {max}] by {:.4}", min - value))
    } else if value > max {
        Some(format!("{axis} {value:.6} is above [{min}, {max}] by {:.4}", value - max))
    } else {
        None
    }
}

/// Normaliza um par de coordenadas vindas da planilha. Nunca falha: o resultado vai em `status`.
pub fn normalize(raw_lat: &str, raw_lng: &str, region: &ServiceRegion) -> NormalizedCoordinates {
    let mut lat = parse_axis(raw_lat);
    let mut lng = parse_axis(raw_lng);

    if lat == 0.0 && lng == 0.0 {
        return NormalizedCoordinates::invalid(lat, lng, "missing".to_string());
    }

    let mut status = CoordinateStatus::Ok;
    if lat.abs() > region.swap_threshold && lng.abs() < region.swap_threshold {
        std::mem::swap(&mut lat, &mut lng);
        status = CoordinateStatus::Swapped;
    }

    let failures: Vec<String> = [
        out_of_range("latitude", lat, region.lat_min, region.lat_max),
        out_of_range("longitude", lng, region.lng_min, region.lng_max),
    ]
    .into_iter()
    .flatten()
    .collect();

    if !failures.is_empty() {
        return NormalizedCoordinates::invalid(lat, lng, failures.join("; "));
    }

    let message = match status {
        CoordinateStatus::Swapped => "latitude and longitude were swapped".to_string(),
        _ => "ok".to_string(),
    };
    NormalizedCoordinates { lat, lng, status, message }
}

/// Distância em metros (haversine) entre dois pontos (lat, lng).
pub fn distance_meters(a: (f64, f64), b: (f64, f64)) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let (lat1, lat2) = (a.0.to_radians(), b.0.to_radians());
    let d_lat = (b.0 - a.0).to_radians();
    let d_lng = (b.1 - a.1).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Mesma posição para fins de deduplicação de locais.
pub fn near_identical(a: (f64, f64), b: (f64, f64)) -> bool {
    const TOLERANCE_DEG: f64 = 1e-4;
    (a.0 - b.0).abs() <= TOLERANCE_DEG && (a.1 - b.1).abs() <= TOLERANCE_DEG
}
