use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::handlers::{GradingHandler, LlmGrader};
use crate::models::ExamType;
use crate::services::LlmService;

/// 处理器注册表
///
/// 启动时建立，之后只读；在并发的流水线之间通过 `Arc` 共享
pub struct HandlerRegistry {
    handlers: HashMap<ExamType, Arc<dyn GradingHandler>>,
}

/// 注册表构建器
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<ExamType, Arc<dyn GradingHandler>>,
}

impl HandlerRegistryBuilder {
    /// 注册处理器，同一类型重复注册时后者覆盖前者
    pub fn register(mut self, exam_type: ExamType, handler: Arc<dyn GradingHandler>) -> Self {
        self.handlers.insert(exam_type, handler);
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// 按配置中的 `[handlers]` 建立 LLM 评分处理器
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::builder();

        for exam_type in ExamType::ALL {
            let Some(handler_config) = config.handlers.get(&exam_type) else {
                continue;
            };
            let llm = LlmService::new(&config.llm).with_overrides(handler_config);
            info!(
                "注册 {} 处理器，模型: {}",
                exam_type.display_name(),
                llm.model_name()
            );
            builder = builder.register(exam_type, Arc::new(LlmGrader::new(exam_type, llm)));
        }

        builder.build()
    }

    pub fn get(&self, exam_type: ExamType) -> Option<Arc<dyn GradingHandler>> {
        self.handlers.get(&exam_type).cloned()
    }

    /// 未注册的类型（非空即配置缺陷）
    pub fn missing_types(&self) -> Vec<ExamType> {
        ExamType::ALL
            .into_iter()
            .filter(|t| !self.handlers.contains_key(t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
