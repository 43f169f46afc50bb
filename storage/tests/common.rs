use std::fs;
use tempfile::TempDir;

pub fn discard_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

/// 创建包含 x、y、z 三个文件的测试目录（y、z 位于子目录中）
pub fn create_xyz_tree() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    fs::create_dir_all(root.join("J1/gridfs_data")).unwrap();
    fs::write(root.join("x"), b"x").unwrap();
    fs::write(root.join("J1/y"), b"y").unwrap();
    fs::write(root.join("J1/gridfs_data/z"), b"z").unwrap();

    temp_dir
}

/// 返回一个当前没有进程监听的本地端口
pub async fn unused_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
