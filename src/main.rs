use anyhow::Context;
use filter_engine::config::{EngineConfig, DEFAULT_CONFIG_FILE};
use filter_engine::diagnostics::Diagnostics;
use filter_engine::filter::Filter;
use filter_engine::sql_compiler::SqlCompiler;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

/// 日志级别环境变量
const LOG_ENV: &str = "FILTER_ENGINE_LOG";

struct Session {
    compiler: SqlCompiler,
    entity: String,
    include_origin: bool,
}

impl Session {
    fn new(config: &EngineConfig) -> Self {
        Self {
            compiler: SqlCompiler::from_config(config.compiler_config()),
            entity: "Product".to_string(),
            include_origin: config.include_origin,
        }
    }

    /// 处理一行输入，返回 false 表示退出
    fn handle(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return true;
        }

        match line.split_once(' ').unwrap_or((line, "")) {
            (":quit" | ":q", _) => return false,
            (":origin", _) => {
                self.include_origin = !self.include_origin;
                println!("origin 标注: {}", if self.include_origin { "开启" } else { "关闭" });
            }
            (":entity", name) if !name.trim().is_empty() => {
                self.entity = name.trim().to_string();
                println!("当前实体: {}", self.entity);
            }
            (":entity", _) => println!("用法: :entity <Name>"),
            (command, _) if command.starts_with(':') => println!("⚠️ 未知命令: {}", command),
            _ => {
                if let Err(e) = self.process(line) {
                    println!("✗ {:#}", e);
                }
            }
        }
        true
    }

    fn process(&self, input: &str) -> anyhow::Result<()> {
        let mut diagnostics = Diagnostics::new();
        let result = Filter::from_json(input, &mut diagnostics);
        for entry in diagnostics.entries() {
            println!("  {}", entry);
        }
        let filter = result.context("过滤器构造失败")?;

        let ast = filter.ast(self.include_origin).context("AST 编译失败")?;
        println!("\n[AST]:\n{}", serde_json::to_string_pretty(&ast)?);

        match filter_engine::odata::to_odata(&ast) {
            Ok(odata) => println!("\n[OData $filter]:\n{}", odata),
            Err(e) => println!("\n⚠️ 无法生成 OData: {}", e),
        }

        match self.compiler.compile(&self.entity, &ast) {
            Ok(result) => {
                println!("\n[生成的 SQL]:\n{}", result.sql);
                if !result.optimizations.is_empty() {
                    println!("\n[应用的优化]:");
                    for opt in &result.optimizations {
                        println!("• {:?}", opt);
                    }
                }
            }
            Err(e) => println!("\n⚠️ 无法生成 SQL: {}", e),
        }
        Ok(())
    }
}

/// 优先使用JSON配置，失败时使用默认配置
fn load_config() -> EngineConfig {
    match EngineConfig::from_json_file(DEFAULT_CONFIG_FILE) {
        Ok(config) => {
            println!("✅ 使用JSON配置文件: {}", DEFAULT_CONFIG_FILE);
            println!("✅ 加载了 {} 个表映射配置", config.get_mappings().len());
            config
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认配置", e);
            EngineConfig::default()
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    println!("--- Filter Engine: 过滤器到 AST / OData / SQL ---");

    let config = load_config();
    let mut session = Session::new(&config);

    // 单个参数时只处理一次
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [input] = args.as_slice() {
        session.process(input)?;
        return Ok(());
    }

    println!("每行输入一个 JSON 过滤器，命令: :origin, :entity <Name>, :quit");
    let mut editor = DefaultEditor::new().context("无法初始化行编辑器")?;
    loop {
        match editor.readline(">> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                if !session.handle(&line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
