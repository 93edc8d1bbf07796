/// Icon shown when the code is missing or unknown.
pub const DEFAULT_ICON: &str = "/icons/Cloud.svg";

/// Map an OpenWeather icon code (e.g. `"10n"`) to a display icon path.
pub fn icon_for_code(code: Option<&str>) -> &'static str {
    match code.unwrap_or_default() {
        "01d" => "/icons/Sun.svg",
        "01n" => "/icons/Moon.svg",
        "02d" => "/icons/Cloud-Sun.svg",
        "02n" => "/icons/Cloud-Moon.svg",
        "03d" | "03n" | "04d" | "04n" => "/icons/Cloud.svg",
        "09d" | "09n" | "10d" | "10n" => "/icons/Cloud-Drizzle.svg",
        "11d" | "11n" => "/icons/Cloud-Hail.svg",
        "13d" | "13n" => "/icons/Cloud-Snow-Alt.svg",
        "50d" | "50n" => "/icons/Cloud-Fog.svg",
        _ => DEFAULT_ICON,
    }
}
