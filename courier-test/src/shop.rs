use courier::{ApiResponse, Cancellation, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
}

#[courier::api(base_url = "http://shop.local/api", name = "Shop")]
pub trait Shop {
    #[header("Authorize")]
    fn authorize(&self) -> Option<String>;
    #[header("Authorize")]
    fn set_authorize(&self, value: Option<String>);

    #[get("/products/{id}")]
    async fn product(&self, #[path] id: i64) -> Result<Product>;

    #[get("/products")]
    async fn search(&self, q: &str, #[query("page")] page: Option<u32>) -> Result<Vec<Product>>;

    #[put("/products/{id}")]
    async fn update(
        &self,
        #[path("id")] product_id: i64,
        #[body] product: &Product,
    ) -> Result<ApiResponse<Product>>;

    #[delete("/products/{id}")]
    async fn remove(
        &self,
        #[path] id: i64,
        #[header("X-Reason")] reason: Option<&str>,
        #[cancel] cancel: &Cancellation,
    ) -> Result<()>;

    #[get("/categories/{name}/products")]
    async fn by_category(&self, #[path] name: &str) -> Result<Vec<Product>>;

    /// not routed, so left as it is
    fn describe_product(&self, product: &Product) -> String {
        format!("{} ({:.2})", product.name, product.price)
    }
}
