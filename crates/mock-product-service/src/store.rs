//! 商品内存存储
//!
//! 基于 DashMap 的并发商品目录。库存扣减的读改写在单个条目的
//! 写锁内完成，并发扣减不会超卖。

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use crate::models::Product;

/// 库存扣减结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockDeduction {
    /// 扣减成功，携带剩余库存
    Deducted { remaining: i32 },
    /// 库存不足，携带当前可用量
    Insufficient { available: i32 },
    /// 商品不存在
    UnknownProduct,
}

/// 商品目录存储
pub struct ProductStore {
    products: DashMap<i64, Product>,
    next_id: AtomicI64,
}

impl ProductStore {
    pub fn new() -> Self {
        Self {
            products: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// 预置演示商品目录
    ///
    /// 包含一件零库存商品，便于演示 Out of Stock 路径。
    pub fn with_demo_catalog() -> Self {
        let store = Self::new();
        store.add("机械键盘", 399.0, 50);
        store.add("显示器支架", 159.5, 30);
        store.add("降噪耳机", 899.0, 10);
        store.add("绝版海报", 49.9, 0);
        store
    }

    /// 录入新商品，自动分配 id
    pub fn add(&self, name: &str, price: f64, qty: i32) -> Product {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let product = Product {
            id,
            name: name.to_string(),
            price,
            qty,
            created_at: Utc::now(),
        };
        self.products.insert(id, product.clone());
        product
    }

    /// 按 id 查询商品，返回快照
    pub fn get(&self, id: i64) -> Option<Product> {
        self.products.get(&id).map(|p| p.clone())
    }

    /// 全部商品，按 id 升序
    pub fn list(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        products.sort_by_key(|p| p.id);
        products
    }

    /// 商品总数
    pub fn count(&self) -> usize {
        self.products.len()
    }

    /// 原子扣减库存
    pub fn try_deduct(&self, product_id: i64, quantity: i32) -> StockDeduction {
        let Some(mut product) = self.products.get_mut(&product_id) else {
            return StockDeduction::UnknownProduct;
        };
        if product.qty < quantity {
            return StockDeduction::Insufficient {
                available: product.qty,
            };
        }
        product.qty -= quantity;
        StockDeduction::Deducted {
            remaining: product.qty,
        }
    }
}

impl Default for ProductStore {
    fn default() -> Self {
        Self::new()
    }
}
