#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    slidesmith_lib::run().await
}
