use pub_detector_lib::model::AppConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    pub_detector_lib::setup_logging();

    let config = AppConfig::load_or_default()?;
    pub_detector_lib::run(config).await
}
