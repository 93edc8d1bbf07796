//! OpenWeather client against a mock HTTP server.

use std::time::Duration;

use weather_widget_core::{
    Coordinates, FetchError, Locator, OpenWeatherClient, UnitSystem, WeatherProvider,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn current_body() -> serde_json::Value {
    serde_json::json!({
        "coord": { "lon": 2.35, "lat": 48.85 },
        "weather": [{ "id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d" }],
        "main": { "temp": 12.3, "feels_like": 11.1, "humidity": 81 },
        "wind": { "speed": 4.1 },
        "dt": 1700000000,
        "sys": { "country": "FR" },
        "name": "Paris"
    })
}

fn forecast_body() -> serde_json::Value {
    serde_json::json!({
        "city": { "name": "Paris", "country": "FR", "coord": { "lat": 48.85, "lon": 2.35 } },
        "list": [
            {
                "dt": 1700000000,
                "main": { "temp": 10.0, "feels_like": 9.0, "humidity": 70, "temp_min": 9.5, "temp_max": 10.5 },
                "weather": [{ "description": "light rain", "icon": "10n" }],
                "wind": { "speed": 3.0 }
            },
            {
                "dt": 1700010800,
                "main": { "temp": 11.0 },
                "weather": [],
                "wind": { "speed": 3.2 }
            }
        ]
    })
}

fn client(server: &MockServer) -> OpenWeatherClient {
    OpenWeatherClient::new(server.uri(), "TEST_KEY".into(), Duration::from_secs(5))
        .expect("client should build")
}

#[tokio::test]
async fn current_by_name_sends_query_and_units() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Paris"))
        .and(query_param("units", "imperial"))
        .and(query_param("appid", "TEST_KEY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
        .expect(1)
        .mount(&server)
        .await;

    let payload = client(&server)
        .fetch_current(&Locator::Name("Paris".into()), UnitSystem::Imperial)
        .await
        .unwrap();

    assert_eq!(payload.name.as_deref(), Some("Paris"));
    assert_eq!(payload.main.and_then(|m| m.temp), Some(12.3));
    assert_eq!(payload.weather[0].icon.as_deref(), Some("04d"));
}

#[tokio::test]
async fn forecast_by_coordinates_sends_lat_lon() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("lat", "52.1"))
        .and(query_param("lon", "4.3"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .expect(1)
        .mount(&server)
        .await;

    let locator = Locator::Coordinates(Coordinates { latitude: 52.1, longitude: 4.3 });
    let payload = client(&server).fetch_forecast(&locator, UnitSystem::Metric).await.unwrap();

    assert_eq!(payload.list.len(), 2);
    assert!(payload.list[1].weather.is_empty());
    assert_eq!(payload.city.and_then(|c| c.country).as_deref(), Some("FR"));
}

#[tokio::test]
async fn not_found_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "cod": "404", "message": "city not found" })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_current(&Locator::Name("Nowhere".into()), UnitSystem::Metric)
        .await
        .unwrap_err();

    assert_eq!(err, FetchError::Status { status: 404, status_text: "Not Found".into() });
}

#[tokio::test]
async fn server_error_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_forecast(&Locator::Name("Paris".into()), UnitSystem::Metric)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 503, .. }));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_current(&Locator::Name("Paris".into()), UnitSystem::Metric)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Decode(_)));
}

#[tokio::test]
async fn slow_server_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(current_body())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = OpenWeatherClient::new(server.uri(), "K".into(), Duration::from_millis(200))
        .expect("client should build");
    let err = client
        .fetch_current(&Locator::Name("Paris".into()), UnitSystem::Metric)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transport(_)));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    // Nothing listens on the discard port.
    let client =
        OpenWeatherClient::new("http://127.0.0.1:9".into(), "K".into(), Duration::from_secs(2))
            .expect("client should build");

    let err = client
        .fetch_current(&Locator::Name("Paris".into()), UnitSystem::Metric)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transport(_)));
}
