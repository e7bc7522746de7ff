mod commands;
mod logging;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "webscope")]
#[command(about = "Web ページを読み、MCP ツールとして届ける。", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// MCP サーバーを起動（streamable HTTP, /browser）
    Serve {
        /// バインドするホスト
        #[arg(long, env = "HOST")]
        host: Option<String>,
        /// 待ち受けポート
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },
    /// MCP サーバーを起動（stdio）
    Mcp,
    /// ページを1回だけ取得して JSON を表示
    Fetch {
        /// 取得する URL
        url: String,
        /// 抽出セレクタ（key=CSSセレクタ、複数指定可）
        #[arg(short, long = "selector", value_parser = commands::fetch::parse_selector_arg)]
        selectors: Vec<(String, String)>,
    },
    /// コンテナイメージ名を表示
    Image {
        /// レジストリのホスト名（省略時は CONTAINER_REGISTRY）
        #[arg(long)]
        registry: Option<String>,
        /// レジストリ内の名前空間（省略時は NAMESPACE）
        #[arg(long)]
        namespace: Option<String>,
        /// タグ（省略時は現在時刻から生成）
        #[arg(short, long)]
        tag: Option<String>,
        /// タグを付けずにイメージ名だけを表示
        #[arg(long, conflicts_with = "tag")]
        name_only: bool,
    },
    /// バージョンを表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => commands::serve::handle(host, port).await,
        Commands::Mcp => commands::mcp::handle().await,
        Commands::Fetch { url, selectors } => commands::fetch::handle(&url, selectors).await,
        Commands::Image {
            registry,
            namespace,
            tag,
            name_only,
        } => {
            commands::image::handle(registry, namespace, tag, name_only);
            Ok(())
        }
        Commands::Version => {
            println!("webscope {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
