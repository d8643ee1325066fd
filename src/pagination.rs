//! 分页切片
//!
//! 对已排序的记录序列做固定大小的偏移分页。
//! 越界页码返回空切片，永远不报错。

/// 每页题目数（全部分页接口固定使用）
pub const QUESTIONS_PER_PAGE: u32 = 10;

/// 取出第 `page` 页（从 1 开始），保持输入顺序
///
/// `start = (page - 1) * page_size`，`end = start + page_size`；
/// `start` 超出序列长度时返回空切片。`page` 为 0 时按第 1 页处理，
/// 任何输入都不会 panic 或回绕。
pub fn paginate<T>(items: &[T], page: u32, page_size: u32) -> &[T] {
    let start = (page.saturating_sub(1) as usize).saturating_mul(page_size as usize);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size as usize).min(items.len());
    &items[start..end]
}
