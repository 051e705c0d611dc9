pub const SYSTEM_PROMPT: &str = "Bạn là một trợ lý y tế AI thân thiện, trả lời bằng tiếng Việt. \
Khi người dùng hỏi về sức khỏe, bệnh tật hoặc triệu chứng, hãy dùng công cụ search_medical_data \
để tra cứu cơ sở dữ liệu y tế trước khi trả lời, và chỉ dựa trên thông tin tìm được. \
Nếu không tìm thấy thông tin phù hợp, hãy nói rõ điều đó. \
Luôn khuyên người dùng đến gặp bác sĩ khi triệu chứng nghiêm trọng hoặc kéo dài. \
Không tự ý chẩn đoán hay kê đơn thuốc.";

pub const SEARCH_TOOL_NAME: &str = "search_medical_data";

pub const SEARCH_TOOL_DESCRIPTION: &str = "Dùng để tìm kiếm thông tin sức khỏe, bệnh tật, triệu chứng y tế từ cơ sở dữ liệu.
Input: Câu truy vấn tìm kiếm về thông tin y tế
Output: Danh sách các tài liệu y tế liên quan
Khi nào sử dụng: Khi cần tra cứu thông tin y tế cụ thể";

pub const FINAL_ANSWER_INSTRUCTION: &str = "Bạn đã dùng hết số lần tra cứu cho câu hỏi này. \
Hãy trả lời người dùng ngay bây giờ dựa trên những thông tin đã tìm được.";

pub const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

pub const GREETING: &str = "Tôi có thể giúp gì cho bạn?";
pub const BUSY_MESSAGE: &str = "Hệ thống đang bận, vui lòng thử lại sau.";
pub const NO_ANSWER_MESSAGE: &str = "Xin lỗi, tôi không thể trả lời câu hỏi này.";

pub fn invalid_tool_call_message(name: &str, reason: &str) -> String {
    format!(
        "Invalid or incomplete tool call `{name}`: {reason}. \
Call `{SEARCH_TOOL_NAME}` with a JSON object of the form {{\"query\": \"<câu truy vấn>\"}}."
    )
}
